/// Hardware constants for supported boards.
///
/// Selected at compile time via feature flags.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const BOARD_NAME: &str = "xiao_esp32s3";
    /// BOOT button, active low
    pub const CANCEL_BUTTON_PIN: Option<u8> = Some(0);
}

#[cfg(all(feature = "board-m5stickc", not(feature = "board-xiao")))]
mod hw {
    pub const BOARD_NAME: &str = "m5stickc_plus2";
    /// Button A, active low
    pub const CANCEL_BUTTON_PIN: Option<u8> = Some(37);
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
    /// Console ESC only
    pub const CANCEL_BUTTON_PIN: Option<u8> = None;
}

pub use hw::*;

/// BLE advertisement payload parsing.
///
/// Walks the length-type-value AD structures of a raw advertisement or scan
/// response and pulls out what the tracker needs: the local name.

/// AD type: shortened local name
const AD_SHORT_NAME: u8 = 0x08;
/// AD type: complete local name
const AD_COMPLETE_NAME: u8 = 0x09;

/// Iterator over `(ad_type, data)` structures in an advertisement payload.
/// Stops at the first zero-length or truncated structure.
pub struct AdStructures<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.data.get(self.pos)? as usize;
        if len == 0 || self.pos + 1 + len > self.data.len() {
            self.pos = self.data.len();
            return None;
        }
        let ad_type = self.data[self.pos + 1];
        let value = &self.data[self.pos + 2..self.pos + 1 + len];
        self.pos += 1 + len;
        Some((ad_type, value))
    }
}

/// Advertised local name. A complete name wins over a shortened one;
/// names that are not valid UTF-8 are skipped.
pub fn local_name(ad_data: &[u8]) -> Option<&str> {
    let mut short = None;
    for (ad_type, value) in AdStructures::new(ad_data) {
        match ad_type {
            AD_COMPLETE_NAME => {
                if let Ok(name) = core::str::from_utf8(value) {
                    return Some(name);
                }
            }
            AD_SHORT_NAME if short.is_none() => {
                short = core::str::from_utf8(value).ok();
            }
            _ => {}
        }
    }
    short
}

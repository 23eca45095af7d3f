use heapless::String;

use crate::config::CONTROLLER_NAME;

/// AD type: Complete Local Name.
pub const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
/// AD type: Shortened Local Name.
pub const AD_SHORTENED_LOCAL_NAME: u8 = 0x08;

/// Iterate the `(ad_type, payload)` structures of raw advertising data.
/// Stops at the first zero-length or truncated structure.
pub fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        if i >= data.len() {
            return None;
        }
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let ad_type = data[i + 1];
        let payload = &data[i + 2..i + 1 + len];
        i += len + 1;
        Some((ad_type, payload))
    })
}

/// Raw bytes of the Complete Local Name, if advertised.
pub fn complete_local_name(data: &[u8]) -> Option<&[u8]> {
    ad_structures(data)
        .find(|(ad_type, _)| *ad_type == AD_COMPLETE_LOCAL_NAME)
        .map(|(_, name)| name)
}

/// True when the advertisement carries exactly the controller's name.
pub fn is_daydream_controller(data: &[u8]) -> bool {
    complete_local_name(data) == Some(CONTROLLER_NAME.as_bytes())
}

/// Extract complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> String<32> {
    let found = ad_structures(data).find(|(ad_type, _)| {
        *ad_type == AD_SHORTENED_LOCAL_NAME || *ad_type == AD_COMPLETE_LOCAL_NAME
    });

    let mut name = String::new();
    match found {
        Some((_, name_bytes)) => {
            for &b in name_bytes {
                if name.push(b as char).is_err() {
                    break;
                }
            }
        }
        None => {
            let _ = name.push_str("Unknown");
        }
    }
    name
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

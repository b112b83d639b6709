/**
 * HMAC-SHA256 authentication tag.
 *
 * The collection service authenticates a request by recomputing
 * HMAC-SHA256 over the UTF-8 bytes of the envelope's `data` field, keyed
 * with the stream's secret, and comparing it to the `auth` field. The tag
 * is transmitted as lowercase hex.
 */
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/**
 * Computes the lowercase-hex HMAC-SHA256 tag for `message` under `key`.
 *
 * The input is exactly the `data` string as it appears in the outgoing
 * envelope, after any bulk-array encoding.
 */
pub fn hmac_hex(key: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

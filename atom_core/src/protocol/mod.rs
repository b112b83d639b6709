/*!
 * Protocol layer: what we put on the wire.
 *
 * - `types` holds `Event`, the request envelope, and the response record.
 * - `auth` computes the HMAC-SHA256 authentication tag.
 */

pub mod auth;
pub mod types;

//! Input checks performed before anything touches the network.

use crate::error::{Error, Result};

/// Photos larger than this are rejected without being submitted.
pub const MAX_PHOTO_BYTES: usize = 1024 * 1024;

/// Minimal address shape check, mirroring the sign-up form: a local part and
/// a dotted domain, no whitespace anywhere.
pub fn valid_email(email: &str) -> bool {
  if email.chars().any(char::is_whitespace) {
    return false;
  }
  let mut parts = email.split('@');
  match (parts.next(), parts.next(), parts.next()) {
    (Some(local), Some(domain), None) => {
      !local.is_empty() && domain.contains('.') && domain.split('.').all(|seg| !seg.is_empty())
    }
    _ => false,
  }
}

pub fn check_email(email: &str) -> Result<()> {
  if valid_email(email) {
    Ok(())
  } else {
    Err(Error::Validation(format!("'{email}' is not a valid email address")))
  }
}

pub fn check_password(password: &str) -> Result<()> {
  if password.len() >= 8 {
    Ok(())
  } else {
    Err(Error::Validation("password must be at least 8 characters".into()))
  }
}

/// Validate a photo and return its MIME type.
///
/// Accepts JPEG, PNG, and GIF up to [`MAX_PHOTO_BYTES`], detected from the
/// file's magic bytes rather than its name.
pub fn photo_mime(bytes: &[u8]) -> Result<&'static str> {
  if bytes.len() > MAX_PHOTO_BYTES {
    return Err(Error::Validation(format!(
      "photo is {} bytes; the limit is {} bytes",
      bytes.len(),
      MAX_PHOTO_BYTES
    )));
  }
  sniff_image(bytes)
    .ok_or_else(|| Error::Validation("photo must be a JPEG, PNG, or GIF image".into()))
}

fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
  if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
    Some("image/jpeg")
  } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
    Some("image/png")
  } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
    Some("image/gif")
  } else {
    None
  }
}

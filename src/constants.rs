pub const MAX_FIELD_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// Largest price a recipe accepts: five digits, two of them decimals.
pub const MAX_PRICE: f64 = 999.99;

pub const MAX_JSON_BYTES: usize = 64 * 1024;

pub const IMAGE_UPLOAD_DIR: &str = "uploads/recipe";

pub const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

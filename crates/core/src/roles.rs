//! Well-known role constants.

/// Default role key that bypasses data-scope filtering.
pub const SUPER_ADMIN_ROLE_KEY: &str = "super_admin";

/// Role and menu states.
pub const STATE_ENABLED: i32 = 1;
pub const STATE_DISABLED: i32 = 2;

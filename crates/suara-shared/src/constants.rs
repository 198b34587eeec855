/// Domain suffix for the synthetic login emails. Identities already stored
/// on the hosted auth provider were created with this suffix; changing it
/// would orphan every existing account.
pub const LOGIN_EMAIL_DOMAIN: &str = "suarasekolah.id";

/// Prefix tag for derived private-chat identifiers.
pub const PRIVATE_CHAT_PREFIX: &str = "private_";

/// Separator between the two participant ids in a private-chat identifier.
pub const CHAT_ID_SEPARATOR: char = '_';

/// Length of a user's public display code.
pub const DISPLAY_CODE_LEN: usize = 8;

/// Alphabet for display codes (upper-case base 36, matching codes already
/// issued by the web client).
pub const DISPLAY_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Minimum accepted password length.
pub const PASSWORD_MIN_LEN: usize = 6;

/// Placeholder stored in the `password_hash` column; real credentials live
/// with the managed auth provider.
pub const PASSWORD_HASH_SENTINEL: &str = "handled_by_supabase_auth";

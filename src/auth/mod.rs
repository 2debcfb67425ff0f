mod identity;
mod session;

pub use identity::{
    IdentityAuthority, IdentityError, MemoryIdentityAuthority, RedisIdentityAuthority,
    SessionRecord,
};
pub use session::{
    AuthFailure, CredentialError, SessionKey, SessionKeyError, SessionResolver, VERSION_PREFIX,
};

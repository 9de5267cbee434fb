pub mod chain;
pub mod factory;
pub mod jwks;
pub mod scope;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{AuthorizationChain, Authorized, Denial, PrincipalPolicy};
pub use factory::build_authorization_chain;
pub use jwks::{JwksKeyResolver, KeyMaterial, KeyResolveError, KeyResolver};
pub use scope::Scopes;
pub use token::{ClaimSet, TokenError, TokenValidator};

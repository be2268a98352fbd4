//! Workspace tooling package.
//!
//! Carries no code; it exists so `rusty-hook` installs the pre-commit checks
//! configured in the root manifest. The library lives in `crates/tradecost-lib`
//! and the binary in `crates/tradecost-cli`.

// Handlers are split by security tier:
// public (no token) → protected (bearer token, plus a per-route guard)
pub mod public;
pub mod protected;

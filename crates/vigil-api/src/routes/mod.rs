//! Route handlers, organized by resource (spec §6.1), mirroring the
//! teacher's `dashflow-registry/src/api/routes` layout: one module per
//! resource, each exposing a `routes(..) -> Router<AppState>` (the
//! `reports` and `utility` modules take a concrete `AppState` so their
//! admin-only routes can be layered with [`crate::auth::require_admin`]
//! up front), nested under `/api/v1` by [`crate::build_router`].

pub mod agent;
pub mod reports;
pub mod utility;

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod error;
pub mod estimate;
pub mod forms;
pub mod ids;
pub mod model;
pub mod oracle;
pub mod render;
pub mod session;
pub mod state;
pub mod store;

pub use error::*;
pub use estimate::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use oracle::*;
pub use session::*;
pub use state::*;
pub use store::*;

// Domain-layer modules and shared errors/models
pub mod carrier {
    pub use crate::carrier::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod units {
    pub use crate::units::*;
}

pub mod validator {
    pub use crate::validator::*;
}

pub mod errors {
    pub use crate::errors::*;
}

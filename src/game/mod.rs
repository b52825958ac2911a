pub mod clock;
pub mod coords;
pub mod oracle;
pub mod selection;
pub mod session;
pub mod utils;

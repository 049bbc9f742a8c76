pub mod credential;
pub mod metadata;
pub mod object;
pub mod proof;
pub mod token;
pub mod util;

pub mod check;
pub mod logs;
pub mod password;
pub mod seed;

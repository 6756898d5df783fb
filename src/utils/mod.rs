pub mod extractor;
pub mod jwt;
pub mod password;
pub mod response;
pub mod validation;

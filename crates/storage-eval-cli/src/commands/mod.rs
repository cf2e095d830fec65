pub mod evaluate;
pub mod project;
pub mod sensitivity;
pub mod statement;

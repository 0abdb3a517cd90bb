pub mod check_paas;
pub mod completions;
pub mod decrypt;
pub mod encrypt;
pub mod generate;
pub mod reencrypt;

pub mod linkedin;

pub use linkedin::LinkedInClient;

mod category;
mod material;
mod profile;

pub use category::Category;
pub use material::Material;
pub use profile::Profile;

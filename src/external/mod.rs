pub mod cloudinary;
pub mod cranberri;
mod feed;
pub mod kyrah;
pub mod stripe;

pub use cloudinary::*;
pub use cranberri::CranberriClient;
pub use kyrah::KyrahClient;
pub use self::stripe::*;

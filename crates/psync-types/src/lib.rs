mod data;
mod missing_data;
mod name;
mod prefix;
pub mod serde_helpers;

pub use self::{
    data::Data,
    missing_data::MissingData,
    name::{Name, NameComponent},
    prefix::{Prefix, SeqNo},
};

mod address;
mod hex;
mod info;

pub use self::{
    address::{AccessContext, Gfn, Pa, TranslationMechanism, Va},
    hex::Hex,
    info::DriverInfo,
};

pub(crate) mod bind;
pub(crate) mod scalar;
pub(crate) mod string;

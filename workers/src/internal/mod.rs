pub(crate) mod backoff;
pub(crate) mod parker;

pub(crate) use parker::Parker;

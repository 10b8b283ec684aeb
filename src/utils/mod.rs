pub(crate) mod chunk;

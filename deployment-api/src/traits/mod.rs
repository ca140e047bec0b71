pub mod iaas;

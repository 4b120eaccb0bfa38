pub mod analyse;

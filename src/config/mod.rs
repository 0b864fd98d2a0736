pub mod fbp3drp;

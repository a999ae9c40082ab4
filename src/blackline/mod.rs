pub mod inverter;
pub mod packet;

pub mod thermo;

// channel-common/src/lib.rs
// Gemeinsame Marktdaten-Typen für Pivot-Produzenten und den Channel-Detector

pub mod data;

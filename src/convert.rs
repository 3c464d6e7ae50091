//! Raw reading to engineering unit conversion.
//!
//! Every 4-20 mA transducer on the rig goes through the same linear mapping:
//! the loop current is recovered from the voltage across the shunt, then
//! mapped so that 4 mA reads zero and 20 mA reads the sensor's full span.

/// Loop current in mA for a voltage measured across a shunt of `shunt_ohms`.
pub fn loop_current_ma(voltage: f32, shunt_ohms: f32) -> f32 {
    voltage / shunt_ohms * 1000.0
}

/// Engineering value of a current-loop sensor with full-scale `span`.
pub fn current_loop(voltage: f32, shunt_ohms: f32, span: f32) -> f32 {
    let current = loop_current_ma(voltage, shunt_ohms);
    (current - 4.0) * span / 16.0
}

/// Shunt voltage produced by a given loop current. Handy for calibration
/// checks and for the mocks in tests.
pub fn shunt_voltage(current_ma: f32, shunt_ohms: f32) -> f32 {
    current_ma * shunt_ohms / 1000.0
}

//! Math built-in object.
//!
//! The Math object provides mathematical constants and functions.
//! Unlike other built-in objects, Math is not a constructor.

use super::Realm;
use crate::Result;
use crate::runtime::function::NativeFn;
use crate::runtime::object::ObjectRef;
use crate::runtime::value::Value;
use crate::vm::Vm;

/// Creates the `Math` object.
pub fn create_object(realm: &Realm) -> ObjectRef {
    let math = realm.new_object();
    math.define("E", Value::Number(E));
    math.define("PI", Value::Number(PI));

    let functions: [(&str, NativeFn); 8] = [
        ("abs", abs),
        ("floor", floor),
        ("ceil", ceil),
        ("round", round),
        ("sqrt", sqrt),
        ("pow", pow),
        ("min", min),
        ("max", max),
    ];
    for (name, function) in functions {
        realm.define_method(&math, name, function);
    }
    math
}

// ============================================================================
// Math Constants
// ============================================================================

/// Math.E - Euler's number (approximately 2.718)
pub const E: f64 = std::f64::consts::E;

/// Math.PI - Ratio of circumference to diameter
pub const PI: f64 = std::f64::consts::PI;

// ============================================================================
// Math Functions
// ============================================================================

fn arg(args: &[Value], index: usize) -> Result<f64> {
    match args.get(index) {
        Some(v) => v.to_number(),
        None => Ok(f64::NAN),
    }
}

/// Math.abs(x) - Returns the absolute value of x.
pub fn abs(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(arg(args, 0)?.abs()))
}

/// Math.floor(x) - Returns the largest integer <= x.
pub fn floor(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(arg(args, 0)?.floor()))
}

/// Math.ceil(x) - Returns the smallest integer >= x.
pub fn ceil(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(arg(args, 0)?.ceil()))
}

/// Math.round(x) - Rounds to the nearest integer; halves round up.
pub fn round(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let x = arg(args, 0)?;
    // Rust's round() rounds halves away from zero; -2.5 must give -2.
    Ok(Value::Number((x + 0.5).floor()))
}

/// Math.sqrt(x) - Returns the square root of x.
pub fn sqrt(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(arg(args, 0)?.sqrt()))
}

/// Math.pow(x, y) - Returns x raised to the power y.
pub fn pow(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let x = arg(args, 0)?;
    let y = arg(args, 1)?;
    // 1 ** NaN is NaN here, unlike powf.
    if y.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(x.powf(y)))
}

/// Math.min(...values) - Returns the smallest argument, or Infinity.
pub fn min(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut result = f64::INFINITY;
    for value in args {
        let n = value.to_number()?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if n < result || (n == 0.0 && result == 0.0 && n.is_sign_negative()) {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

/// Math.max(...values) - Returns the largest argument, or -Infinity.
pub fn max(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let n = value.to_number()?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if n > result || (n == 0.0 && result == 0.0 && n.is_sign_positive()) {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: NativeFn, args: &[f64]) -> f64 {
        let mut vm = Vm::new();
        let args: Vec<Value> = args.iter().map(|n| Value::Number(*n)).collect();
        f(&mut vm, &Value::Undefined, &args).unwrap().as_number().unwrap()
    }

    #[test]
    fn test_abs() {
        assert_eq!(call(abs, &[-5.0]), 5.0);
        assert!(call(abs, &[]).is_nan());
    }

    #[test]
    fn test_round_halves_up() {
        assert_eq!(call(round, &[2.5]), 3.0);
        assert_eq!(call(round, &[-2.5]), -2.0);
        assert_eq!(call(round, &[2.4]), 2.0);
    }

    #[test]
    fn test_floor_ceil_sqrt_pow() {
        assert_eq!(call(floor, &[1.7]), 1.0);
        assert_eq!(call(ceil, &[1.2]), 2.0);
        assert_eq!(call(sqrt, &[16.0]), 4.0);
        assert_eq!(call(pow, &[2.0, 10.0]), 1024.0);
        assert!(call(pow, &[1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call(min, &[3.0, 1.0, 2.0]), 1.0);
        assert_eq!(call(max, &[3.0, 1.0, 2.0]), 3.0);
        assert_eq!(call(min, &[]), f64::INFINITY);
        assert_eq!(call(max, &[]), f64::NEG_INFINITY);
        assert!(call(max, &[1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn test_constants_are_installed() {
        let realm = Realm::new();
        let math = create_object(&realm);
        assert_eq!(math.get("PI"), Value::Number(PI));
        assert!(math.get("max").is_function());
    }
}

//! Number built-in object.
//!
//! Provides the Number constructor, its constants and prototype methods.

use super::Realm;
use super::boolean::box_value;
use crate::runtime::object::{ObjectKind, ObjectRef};
use crate::runtime::value::{Value, number_to_string};
use crate::vm::Vm;
use crate::{Error, Result};

// ============================================================================
// Number Constants
// ============================================================================

/// Number.MAX_VALUE - Largest positive finite value.
pub const MAX_VALUE: f64 = f64::MAX;

/// Number.MIN_VALUE - Smallest positive value (closest to 0).
pub const MIN_VALUE: f64 = 5e-324;

/// Creates the `Number` constructor and fills in its prototype.
pub fn create_constructor(realm: &Realm) -> ObjectRef {
    realm.define_method(&realm.number_prototype, "toString", to_string);
    realm.define_method(&realm.number_prototype, "valueOf", value_of);

    let constructor = realm.constructor(
        "Number",
        number_call,
        number_construct,
        &realm.number_prototype,
    );
    constructor.define("MAX_VALUE", Value::Number(MAX_VALUE));
    constructor.define("MIN_VALUE", Value::Number(MIN_VALUE));
    constructor.define("NaN", Value::Number(f64::NAN));
    constructor.define("POSITIVE_INFINITY", Value::Number(f64::INFINITY));
    constructor.define("NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY));
    constructor
}

// ============================================================================
// Number Constructor
// ============================================================================

/// Number(value) - Converts value to a number primitive.
pub fn number_call(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let n = match args.first() {
        Some(v) => v.to_number()?,
        None => 0.0,
    };
    Ok(Value::Number(n))
}

/// new Number(value) - Creates a Number wrapper object.
pub fn number_construct(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let n = number_call(vm, this, args)?;
    box_value(vm, &n)
}

// ============================================================================
// Number.prototype Methods
// ============================================================================

/// Number.prototype.toString([radix]) - Converts to a string.
///
/// Radixes other than 10 are supported for integral values only.
pub fn to_string(_vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let n = this_number(this)?;
    let radix = match args.first() {
        Some(v) if !v.is_undefined() => v.to_integer()?,
        _ => 10.0,
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(Error::TypeError("toString() radix must be between 2 and 36".into()));
    }
    if radix == 10.0 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(Value::String(number_to_string(n)));
    }
    Ok(Value::String(integer_to_radix(n, radix as u32)))
}

/// Number.prototype.valueOf() - Returns the number value.
pub fn value_of(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(this_number(this)?))
}

fn this_number(this: &Value) -> Result<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(object) => match object.borrow().kind {
            ObjectKind::Number(n) => Ok(n),
            _ => Err(Error::TypeError("Number.prototype method called on incompatible receiver".into())),
        },
        _ => Err(Error::TypeError("Number.prototype method called on incompatible receiver".into())),
    }
}

fn integer_to_radix(n: f64, radix: u32) -> String {
    let negative = n < 0.0;
    let mut value = n.abs();
    let mut digits = Vec::new();
    loop {
        let digit = (value % radix as f64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        value = (value / radix as f64).floor();
        if value == 0.0 {
            break;
        }
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_call() {
        let mut vm = Vm::new();
        assert_eq!(number_call(&mut vm, &Value::Undefined, &[]).unwrap(), Value::Number(0.0));
        assert_eq!(
            number_call(&mut vm, &Value::Undefined, &[Value::from(" 12 ")]).unwrap(),
            Value::Number(12.0)
        );
        let nan = number_call(&mut vm, &Value::Undefined, &[Value::from("abc")]).unwrap();
        assert!(nan.as_number().unwrap().is_nan());
    }

    #[test]
    fn test_to_string_radix() {
        let mut vm = Vm::new();
        let n = Value::Number(255.0);
        assert_eq!(to_string(&mut vm, &n, &[]).unwrap(), Value::from("255"));
        assert_eq!(to_string(&mut vm, &n, &[Value::Number(16.0)]).unwrap(), Value::from("ff"));
        assert_eq!(
            to_string(&mut vm, &Value::Number(-5.0), &[Value::Number(2.0)]).unwrap(),
            Value::from("-101")
        );
        assert!(to_string(&mut vm, &n, &[Value::Number(1.0)]).is_err());
    }

    #[test]
    fn test_value_of_boxed() {
        let mut vm = Vm::new();
        let boxed = number_construct(&mut vm, &Value::Undefined, &[Value::Number(3.5)]).unwrap();
        assert_eq!(value_of(&mut vm, &boxed, &[]).unwrap(), Value::Number(3.5));
    }
}

//! Console built-in object.
//!
//! Provides `console.log`.

use super::Realm;
use crate::Result;
use crate::runtime::object::ObjectRef;
use crate::runtime::value::Value;
use crate::vm::Vm;

/// Creates the `console` object.
pub fn create_object(realm: &Realm) -> ObjectRef {
    let console = realm.new_object();
    realm.define_method(&console, "log", console_log);
    console
}

/// Formats arguments the way `console.log` prints them.
pub fn format_args(args: &[Value]) -> String {
    let output: Vec<String> = args.iter().map(|v| format!("{}", v)).collect();
    output.join(" ")
}

/// Console.log - prints to stdout
pub fn console_log(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    println!("{}", format_args(args));
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_args_joins_with_spaces() {
        let args = [Value::from("a"), Value::Number(1.0), Value::Undefined];
        assert_eq!(format_args(&args), "a 1 undefined");
        assert_eq!(format_args(&[]), "");
    }

    #[test]
    fn test_log_returns_undefined() {
        let mut vm = Vm::new();
        assert_eq!(
            console_log(&mut vm, &Value::Undefined, &[Value::from("hi")]).unwrap(),
            Value::Undefined
        );
    }
}

use std::cmp::Ordering;

use rand::Rng;

use super::{aux_bool, aux_f64, aux_field, aux_string, aux_value};
use super::{degrees_to_radians, radians_to_degrees, truncate_float};
use crate::block::{Args, BlockDescriptor};
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::opcode::{Context, Registry};
use crate::value::Value;

pub fn register(registry: &mut Registry) {
  registry.reporter("operator_add", add);
  registry.reporter("operator_subtract", subtract);
  registry.reporter("operator_multiply", multiply);
  registry.reporter("operator_divide", divide);
  registry.reporter("operator_random", random);
  registry.reporter("operator_lt", lt);
  registry.reporter("operator_equals", equals);
  registry.reporter("operator_gt", gt);
  registry.reporter("operator_and", and);
  registry.reporter("operator_or", or);
  registry.reporter("operator_not", not);
  registry.reporter("operator_join", join);
  registry.reporter("operator_letter_of", letter_of);
  registry.reporter("operator_length", length);
  registry.reporter("operator_contains", contains);
  registry.reporter("operator_mod", modulo);
  registry.reporter("operator_round", round);
  registry.reporter("operator_mathop", mathop);
}

fn add(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  Ok(Value::Number(aux_f64(ctx, args, "NUM1") + aux_f64(ctx, args, "NUM2")))
}

fn subtract(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(aux_f64(ctx, args, "NUM1") - aux_f64(ctx, args, "NUM2")))
}

fn multiply(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(aux_f64(ctx, args, "NUM1") * aux_f64(ctx, args, "NUM2")))
}

fn divide(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(aux_f64(ctx, args, "NUM1") / aux_f64(ctx, args, "NUM2")))
}

/// Whole bounds pick a whole number; anything else picks a real number.
fn random(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let from = aux_value(args, "FROM");
  let to = aux_value(args, "TO");
  let n_from = aux_f64(ctx, args, "FROM");
  let n_to = aux_f64(ctx, args, "TO");
  let (low, high) = if n_from <= n_to {
    (n_from, n_to)
  } else {
    (n_to, n_from)
  };
  let picked = if low == high || !low.is_finite() || !high.is_finite() {
    low
  } else if from.is_int() && to.is_int() {
    ctx.shared.rng.random_range(low as i64..=high as i64) as f64
  } else {
    low + ctx.shared.rng.random::<f64>() * (high - low)
  };
  Ok(Value::Number(picked))
}

fn compare(ctx: &mut Context<'_>, args: &Args<'_>) -> Option<Ordering> {
  let a = aux_value(args, "OPERAND1");
  let b = aux_value(args, "OPERAND2");
  match a.compare(&b) {
    Ok(ordering) => Some(ordering),
    Err(error) => {
      ctx.report(DiagnosticKind::InvalidCoercion, error.to_string());
      None
    }
  }
}

fn lt(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  Ok(Value::Bool(compare(ctx, args) == Some(Ordering::Less)))
}

fn equals(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Bool(compare(ctx, args) == Some(Ordering::Equal)))
}

fn gt(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  Ok(Value::Bool(compare(ctx, args) == Some(Ordering::Greater)))
}

fn and(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  let a = aux_bool(ctx, args, "OPERAND1");
  let b = aux_bool(ctx, args, "OPERAND2");
  Ok(Value::Bool(a && b))
}

fn or(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  let a = aux_bool(ctx, args, "OPERAND1");
  let b = aux_bool(ctx, args, "OPERAND2");
  Ok(Value::Bool(a || b))
}

fn not(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  Ok(Value::Bool(!aux_bool(ctx, args, "OPERAND")))
}

fn join(ctx: &mut Context<'_>, _: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  let mut joined = aux_string(ctx, args, "STRING1");
  joined.push_str(&aux_string(ctx, args, "STRING2"));
  Ok(Value::Text(joined))
}

fn letter_of(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let letter = aux_f64(ctx, args, "LETTER").floor();
  let string = aux_string(ctx, args, "STRING");
  let picked = if letter >= 1. {
    string.chars().nth(letter as usize - 1)
  } else {
    None
  };
  Ok(Value::Text(picked.map(String::from).unwrap_or_default()))
}

fn length(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(aux_string(ctx, args, "STRING").chars().count() as f64))
}

fn contains(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let haystack = aux_string(ctx, args, "STRING1").to_lowercase();
  let needle = aux_string(ctx, args, "STRING2").to_lowercase();
  Ok(Value::Bool(haystack.contains(&needle)))
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let n = aux_f64(ctx, args, "NUM1");
  let modulus = aux_f64(ctx, args, "NUM2");
  let mut result = n % modulus;
  if result / modulus < 0. {
    result += modulus;
  }
  Ok(Value::Number(result))
}

fn round(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(aux_f64(ctx, args, "NUM").round()))
}

fn mathop(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let value = aux_f64(ctx, args, "NUM");
  let result = match aux_field(block, "OPERATOR") {
    "abs" => value.abs(),
    "floor" => value.floor(),
    "ceiling" => value.ceil(),
    "sqrt" => value.sqrt(),
    "sin" => truncate_float(degrees_to_radians(value).sin()),
    "cos" => truncate_float(degrees_to_radians(value).cos()),
    "tan" => {
      let angle = value % 360.;
      if angle == -270. || angle == 90. {
        f64::INFINITY
      } else if angle == -90. || angle == 270. {
        f64::NEG_INFINITY
      } else {
        truncate_float(degrees_to_radians(angle).tan())
      }
    }
    "asin" => radians_to_degrees(value.asin()),
    "acos" => radians_to_degrees(value.acos()),
    "atan" => radians_to_degrees(value.atan()),
    "ln" => value.ln(),
    "log" => value.log10(),
    "e ^" => value.exp(),
    "10 ^" => 10f64.powf(value),
    _ => 0.,
  };
  Ok(Value::Number(result))
}

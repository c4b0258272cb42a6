use rand::Rng;

use super::{aux_f64, aux_list, aux_value, aux_variable};
use crate::block::{Args, BlockDescriptor};
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::opcode::{noop, BlockResult, Context, Registry};
use crate::value::{list_contents, Value};

pub fn register(registry: &mut Registry) {
  registry.command("data_setvariableto", set_variable_to);
  registry.command("data_changevariableby", change_variable_by);
  registry.command("data_showvariable", noop);
  registry.command("data_hidevariable", noop);
  registry.command("data_addtolist", add_to_list);
  registry.command("data_deleteoflist", delete_of_list);
  registry.command("data_deletealloflist", delete_all_of_list);
  registry.command("data_insertatlist", insert_at_list);
  registry.command("data_replaceitemoflist", replace_item_of_list);
  registry.reporter("data_itemoflist", item_of_list);
  registry.reporter("data_itemnumoflist", item_num_of_list);
  registry.reporter("data_lengthoflist", length_of_list);
  registry.reporter("data_listcontainsitem", list_contains_item);
  registry.reporter("data_listcontents", list_contents_of);
  registry.command("data_showlist", noop);
  registry.command("data_hidelist", noop);
}

fn set_variable_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if let Some(variable) = aux_variable(block) {
    ctx.set_variable(variable, aux_value(args, "VALUE"));
  }
  Ok(BlockResult::next(block.next))
}

fn change_variable_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if let Some(variable) = aux_variable(block) {
    let by = aux_f64(ctx, args, "VALUE");
    let current = match ctx.variable(variable).to_number() {
      Ok(number) => number,
      Err(error) => {
        ctx.report(DiagnosticKind::InvalidCoercion, error.to_string());
        0.
      }
    };
    ctx.set_variable(variable, Value::Number(current + by));
  }
  Ok(BlockResult::next(block.next))
}

/// Resolves a 1-based list index (`last`, `random` and `any` included) against
/// a list of `len` items.
fn resolve_index(ctx: &mut Context<'_>, index: &Value, len: usize) -> Option<usize> {
  if let Value::Text(text) = index {
    match text.as_str() {
      "last" => return len.checked_sub(1),
      "random" | "any" if len > 0 => {
        return Some(ctx.shared.rng.random_range(0..len));
      }
      "random" | "any" => return None,
      _ => {}
    }
  }
  let index = index.to_number().ok()?.floor();
  if index < 1. || index > len as f64 {
    None
  } else {
    Some(index as usize - 1)
  }
}

fn add_to_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let Some(list) = aux_list(block) else {
    return Ok(BlockResult::next(block.next));
  };
  let limit = ctx.shared.config.max_list_items;
  if ctx.list(list).len() >= limit {
    ctx.report(DiagnosticKind::ListLimit, format!("list is full ({limit} items)"));
    return Ok(BlockResult::next(block.next));
  }
  let item = aux_value(args, "ITEM");
  if let Some(items) = ctx.list_mut(list) {
    items.push(item);
  }
  Ok(BlockResult::next(block.next))
}

fn delete_of_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let Some(list) = aux_list(block) else {
    return Ok(BlockResult::next(block.next));
  };
  let index = aux_value(args, "INDEX");
  if index == Value::from("all") {
    if let Some(items) = ctx.list_mut(list) {
      items.clear();
    }
    return Ok(BlockResult::next(block.next));
  }
  let len = ctx.list(list).len();
  if let Some(index) = resolve_index(ctx, &index, len) {
    if let Some(items) = ctx.list_mut(list) {
      items.remove(index);
    }
  }
  Ok(BlockResult::next(block.next))
}

fn delete_all_of_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  if let Some(items) = aux_list(block).and_then(|list| ctx.list_mut(list)) {
    items.clear();
  }
  Ok(BlockResult::next(block.next))
}

fn insert_at_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let Some(list) = aux_list(block) else {
    return Ok(BlockResult::next(block.next));
  };
  let len = ctx.list(list).len();
  let limit = ctx.shared.config.max_list_items;
  if len >= limit {
    ctx.report(DiagnosticKind::ListLimit, format!("list is full ({limit} items)"));
    return Ok(BlockResult::next(block.next));
  }
  let index = aux_value(args, "INDEX");
  // One past the end appends.
  let position = resolve_index(ctx, &index, len + 1);
  let item = aux_value(args, "ITEM");
  if let (Some(position), Some(items)) = (position, ctx.list_mut(list)) {
    items.insert(position, item);
  }
  Ok(BlockResult::next(block.next))
}

fn replace_item_of_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let Some(list) = aux_list(block) else {
    return Ok(BlockResult::next(block.next));
  };
  let len = ctx.list(list).len();
  let index = aux_value(args, "INDEX");
  let position = resolve_index(ctx, &index, len);
  let item = aux_value(args, "ITEM");
  if let (Some(position), Some(items)) = (position, ctx.list_mut(list)) {
    items[position] = item;
  }
  Ok(BlockResult::next(block.next))
}

fn item_of_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let Some(list) = aux_list(block) else {
    return Ok(Value::default());
  };
  let len = ctx.list(list).len();
  let index = aux_value(args, "INDEX");
  Ok(
    resolve_index(ctx, &index, len)
      .and_then(|position| ctx.list(list).get(position).cloned())
      .unwrap_or_default(),
  )
}

/// 1-based position of the first matching item, 0 when absent.
fn item_num_of_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let item = aux_value(args, "ITEM");
  let position = aux_list(block)
    .and_then(|list| {
      ctx
        .list(list)
        .iter()
        .position(|candidate| candidate.scratch_eq(&item).unwrap_or(false))
    })
    .map_or(0., |position| position as f64 + 1.);
  Ok(Value::Number(position))
}

fn length_of_list(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let len = aux_list(block).map_or(0, |list| ctx.list(list).len());
  Ok(Value::Number(len as f64))
}

fn list_contains_item(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let item = aux_value(args, "ITEM");
  let found = aux_list(block).is_some_and(|list| {
    ctx
      .list(list)
      .iter()
      .any(|candidate| candidate.scratch_eq(&item).unwrap_or(false))
  });
  Ok(Value::Bool(found))
}

fn list_contents_of(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let contents = aux_list(block).map(|list| list_contents(ctx.list(list)));
  Ok(Value::Text(contents.unwrap_or_default()))
}

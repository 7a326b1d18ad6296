use super::set::{Entry, Parameters};
use super::LOOKUP_MISS;

enum RefAction {
    Plain,
    Calc { dep: Option<String> },
    Lookup { template: String, attr: String },
}

/// Substitutes every `<<name>>` placeholder in `input` against `params`.
///
/// Each placeholder occurrence fires the referenced parameter's
/// per-reference update hook exactly once, unless `update` is false (dry
/// resolution for display). Unknown names render as their literal
/// placeholder text so partially bound templates stay legible.
pub(crate) fn render(params: &mut Parameters, input: &str, update: bool) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let start = match rest.find("<<") {
            Some(start) => start,
            None => {
                output.push_str(rest);
                break;
            }
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let after = match after_start.strip_prefix("<<") {
            Some(after) => after,
            None => {
                output.push_str(after_start);
                break;
            }
        };
        let end = match after.find(">>") {
            Some(end) => end,
            None => {
                output.push_str("<<");
                output.push_str(after);
                break;
            }
        };
        let (key_part, after_end) = after.split_at(end);
        output.push_str(&resolve(params, key_part.trim(), update));
        rest = match after_end.strip_prefix(">>") {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}

fn resolve(params: &mut Parameters, key: &str, update: bool) -> String {
    let action = match params.get(key) {
        None => return format!("<<{key}>>"),
        Some(Entry::Int(value)) => return value.to_string(),
        Some(Entry::Float(value)) => return value.to_string(),
        Some(Entry::Str(value)) => return value.clone(),
        Some(Entry::Param(param)) => {
            if let Some((template, attr)) = param.lookup_parts() {
                RefAction::Lookup {
                    template: template.to_owned(),
                    attr: attr.to_owned(),
                }
            } else if let Some(dep) = param.calc_dep() {
                RefAction::Calc {
                    dep: Some(dep.to_owned()),
                }
            } else {
                RefAction::Plain
            }
        }
    };

    match action {
        RefAction::Plain => {
            if update && let Some(param) = params.get_param_mut(key) {
                param.update_on_reference();
            }
            current_text(params, key)
        }
        RefAction::Calc { dep } => {
            if update {
                let counter = dep.and_then(|dep| params.counter(&dep)).unwrap_or(0);
                if let Some(param) = params.get_param_mut(key) {
                    param.update_calc(counter);
                }
            }
            current_text(params, key)
        }
        RefAction::Lookup { template, attr } => {
            // The lookup key is rendered dry so referenced parameters do not
            // advance a second time for the same occurrence.
            let name = render(params, &template, false);
            params
                .get_param(key)
                .and_then(|param| param.lookup_attr(&name, &attr))
                .unwrap_or_else(|| LOOKUP_MISS.to_owned())
        }
    }
}

fn current_text(params: &Parameters, key: &str) -> String {
    params
        .get_param(key)
        .map(|param| param.value().to_string())
        .unwrap_or_default()
}

use xs_core::{DataType, ParameterSyntax, ParameterType, ScriptParameter};

fn precedence(operator: &str) -> Option<u8> {
    Some(match operator {
        "OR" | "or" => 1,
        "AND" | "and" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "+" | "-" => 8,
        "*" | "/" | "mod" => 9,
        _ => return None,
    })
}

/// Reorders infix expression tokens into postfix (shunting-yard, left associative).
///
/// Parentheses are consumed. Unbalanced parentheses are dropped rather than reported;
/// the infix form is what gets validated.
pub fn to_postfix(infix: &[ScriptParameter]) -> Vec<ScriptParameter> {
    let mut output = Vec::with_capacity(infix.len());
    let mut operators: Vec<&ScriptParameter> = Vec::new();

    for token in infix {
        if token.data_type != DataType::Operator {
            output.push(token.clone());
            continue;
        }
        match token.text.as_str() {
            "(" => operators.push(token),
            ")" => {
                while let Some(top) = operators.pop() {
                    if top.text == "(" {
                        break;
                    }
                    output.push(top.clone());
                }
            }
            symbol => {
                let rank = precedence(symbol).unwrap_or(0);
                while let Some(top) = operators.last() {
                    match precedence(&top.text) {
                        Some(top_rank) if top_rank >= rank => {
                            output.push((*top).clone());
                            operators.pop();
                        }
                        _ => break,
                    }
                }
                operators.push(token);
            }
        }
    }
    while let Some(top) = operators.pop() {
        if top.text != "(" {
            output.push(top.clone());
        }
    }

    for (position, token) in output.iter_mut().enumerate() {
        token.syntax = ParameterSyntax::new(ParameterType::ExpressionToken, position, position);
    }
    output
}

//! Text output
//!
//! Writes the same S-expression syntax [`super::read`] accepts. A node whose
//! children are all leaves stays on one line; otherwise every child gets its
//! own line, indented two spaces, and closing parens stack on the last line.

use super::{ExprId, ExprKind, Function, Module, Type};

/// Format a whole module
pub fn print_module(module: &Module) -> String {
    let mut fields: Vec<String> = Vec::new();
    for import in &module.imports {
        fields.push(format!(
            "(import ${}{}{})",
            import.name,
            format_types("param", &import.params),
            format_result(import.result)
        ));
    }
    for global in &module.globals {
        fields.push(format!("(global ${} {})", global.name, global.ty));
    }
    for func in &module.functions {
        fields.push(print_function(func));
    }

    if fields.is_empty() {
        return "(module)\n".to_string();
    }
    let body: Vec<String> = fields.iter().map(|field| indent(field, 2)).collect();
    format!("(module\n{})\n", body.join("\n"))
}

/// Format a single function
pub fn print_function(func: &Function) -> String {
    let header = format!(
        "(func ${}{}{}{}",
        func.name,
        format_types("param", &func.params),
        format_result(func.result),
        format_types("local", &func.locals)
    );
    format!("{header}\n{})", indent(&print_expr(func, func.body), 2))
}

/// Format the subtree rooted at `id`
pub fn print_expr(func: &Function, id: ExprId) -> String {
    let head = format_head(func, id);
    let children = func[id].kind.children();
    if children.iter().all(|&child| func[child].kind.children().is_empty()) {
        let mut line = format!("({head}");
        for child in children {
            line.push(' ');
            line.push_str(&print_expr(func, child));
        }
        line.push(')');
        return line;
    }

    let mut out = format!("({head}");
    for child in children {
        out.push('\n');
        out.push_str(&indent(&print_expr(func, child), 2));
    }
    out.push(')');
    out
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines().map(|line| format!("{pad}{line}")).collect::<Vec<_>>().join("\n")
}

fn format_types(keyword: &str, types: &[Type]) -> String {
    if types.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = types.iter().map(|ty| ty.as_str()).collect();
    format!(" ({keyword} {})", names.join(" "))
}

fn format_result(ty: Type) -> String {
    if ty.is_concrete() { format!(" (result {ty})") } else { String::new() }
}

fn format_label(name: &Option<super::Label>) -> String {
    name.as_ref().map(|label| format!(" {label}")).unwrap_or_default()
}

/// Operator name plus any immediates, without the parens or children
fn format_head(func: &Function, id: ExprId) -> String {
    let ty = func[id].ty;
    match &func[id].kind {
        ExprKind::Nop => "nop".to_string(),
        ExprKind::Unreachable => "unreachable".to_string(),
        ExprKind::Const(literal) => format!("{}.const {literal}", literal.ty()),
        ExprKind::LocalGet { index } => format!("local.get {index}"),
        ExprKind::LocalSet { index, .. } => format!("local.set {index}"),
        ExprKind::GlobalGet { name } => format!("global.get ${name}"),
        ExprKind::GlobalSet { name, .. } => format!("global.set ${name}"),
        ExprKind::Block { name, .. } => format!("block{}{}", format_label(name), format_result(ty)),
        ExprKind::Loop { name, .. } => format!("loop{}{}", format_label(name), format_result(ty)),
        ExprKind::If { .. } => format!("if{}", format_result(ty)),
        ExprKind::Break { name, condition, .. } => {
            let op = if condition.is_some() { "br_if" } else { "br" };
            format!("{op} {name}")
        }
        ExprKind::Switch { targets, default, .. } => {
            let labels: Vec<String> = targets.iter().chain(std::iter::once(default)).map(|l| l.to_string()).collect();
            format!("br_table {}", labels.join(" "))
        }
        ExprKind::Call { target, .. } => format!("call ${target}"),
        ExprKind::CallIndirect { result, .. } => format!("call_indirect{}", format_result(*result)),
        ExprKind::Unary { op, .. } => op.name(),
        ExprKind::Binary { op, .. } => op.name(),
        ExprKind::Select { .. } => "select".to_string(),
        ExprKind::Drop { .. } => "drop".to_string(),
        ExprKind::Return { .. } => "return".to_string(),
        ExprKind::Load { ty, atomic: false, .. } => format!("{ty}.load"),
        ExprKind::Load { ty, atomic: true, .. } => format!("{ty}.atomic.load"),
        ExprKind::Store { ty, atomic: false, .. } => format!("{ty}.store"),
        ExprKind::Store { ty, atomic: true, .. } => format!("{ty}.atomic.store"),
        ExprKind::AtomicRmw { op, ty, .. } => format!("{ty}.atomic.rmw.{}", op.as_str()),
        ExprKind::AtomicCmpxchg { ty, .. } => format!("{ty}.atomic.rmw.cmpxchg"),
    }
}

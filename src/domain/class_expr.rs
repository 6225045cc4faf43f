use crate::domain::class::Class;
use crate::domain::host::Host;
use crate::domain::model::Model;
use crate::error::EngineError;

/// A resolved class expression: either a single registered class, or a
/// transient composite built from the named atomic classes. The transient
/// composite borrows its members from the registry; it is never stored
/// there.
pub enum ClassExpr<'a> {
    Single(&'a Class),
    Composite(Vec<&'a Class>),
}

/// Parse a comma-separated class expression and resolve every name against the
/// registry. Returns a permanent "no such class" error if any name is
/// missing.
pub fn resolve<'a>(model: &'a Model, expr: &str) -> Result<ClassExpr<'a>, EngineError> {
    let names: Vec<&str> = expr.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if names.is_empty() {
        return Err(EngineError::permanent("empty class expression"));
    }

    let mut resolved = Vec::with_capacity(names.len());
    for name in &names {
        match model.class(name) {
            Some(c) => resolved.push(c),
            None => return Err(EngineError::permanent(format!("no such class: {name}"))),
        }
    }

    if resolved.len() == 1 {
        Ok(ClassExpr::Single(resolved[0]))
    } else {
        Ok(ClassExpr::Composite(resolved))
    }
}

/// `containsHost`: true if the class names one of the host's classes
/// directly, or, for a composite expression, if every member contains the
/// host (intersection semantics). A single registered class that is itself
/// composite recurses into its members the same way. An atomic class that
/// does not name the host is false.
pub fn contains_host(expr: &ClassExpr, host: &Host) -> bool {
    match expr {
        ClassExpr::Single(class) if class.is_composite() => {
            class.members.iter().all(|m| host.classes.iter().any(|c| c == m))
        }
        ClassExpr::Single(class) => host.classes.iter().any(|c| c == &class.name),
        ClassExpr::Composite(members) => members.iter().all(|m| host.classes.iter().any(|c| c == &m.name)),
    }
}

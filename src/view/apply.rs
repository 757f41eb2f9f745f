use crate::engine::Graphics;
use crate::error::ApplyError;
use crate::host::{CallArg, View};
use crate::view::{Arg, PropertyList};

/// Most positional arguments a view call accepts.
pub const MAX_ARGS: usize = 6;

/// Applies every instruction of `properties` to `view`. A failing
/// instruction is skipped and returned, the rest are still applied.
pub(crate) fn apply_view(
    name: &str,
    view: &mut dyn View,
    properties: &PropertyList,
    graphics: &Graphics,
) -> Vec<ApplyError> {
    let mut errors = Vec::new();

    for (kind, instructions) in properties.iter() {
        let method = kind.method();

        for instruction in instructions {
            if let Err(err) = apply_one(name, view, method, &instruction.args, graphics) {
                tracing::warn!(view = name, method, "{err}");
                errors.push(err);
            }
        }
    }

    errors
}

fn apply_one(
    name: &str,
    view: &mut dyn View,
    method: &str,
    args: &[Arg],
    graphics: &Graphics,
) -> Result<(), ApplyError> {
    if args.is_empty() || args.len() > MAX_ARGS {
        return Err(ApplyError::Arity {
            method: method.to_string(),
            count: args.len(),
            max: MAX_ARGS,
        });
    }

    let args = args
        .iter()
        .map(|arg| resolve(arg, method, graphics))
        .collect::<Result<Vec<_>, _>>()?;

    view.apply(method, &args).map_err(|source| ApplyError::Host {
        view: name.to_string(),
        method: method.to_string(),
        source,
    })
}

fn resolve<'a>(
    arg: &'a Arg,
    method: &str,
    graphics: &'a Graphics,
) -> Result<CallArg<'a>, ApplyError> {
    Ok(match arg {
        Arg::Graphic(id) => {
            let graphic = graphics.get(*id).ok_or_else(|| ApplyError::UnknownGraphic {
                method: method.to_string(),
                index: id.0,
            })?;
            CallArg::Graphic(graphic)
        }
        Arg::Int(value) => CallArg::Int(*value),
        Arg::Number(value) => CallArg::Number(*value),
        Arg::Bool(value) => CallArg::Bool(*value),
        Arg::Text(value) => CallArg::Text(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GraphicId;
    use crate::host::{Recorder, Visualization};
    use crate::view::{Instruction, PropertyKind};

    #[test]
    fn test_failures_skip_single_instruction() {
        let mut recorder = Recorder::new().fail_on("setLimits");
        let mut graphics = Graphics::default();
        let id = graphics.push(recorder.create_graphic("a", "", 0).unwrap());
        let mut view = recorder.create_view("plot", "graph").unwrap();

        let mut list = PropertyList::default();
        list.push(
            PropertyKind::GraphicEx,
            Instruction::new(vec![Arg::Graphic(id), Arg::Int(0), Arg::Int(255)]),
        );
        list.push(
            PropertyKind::GraphicEx,
            Instruction::new(vec![Arg::Graphic(GraphicId(7))]),
        );
        list.push(PropertyKind::Set, Instruction::new(vec![Arg::Int(0); 7]));
        list.push(PropertyKind::Set, Instruction::new(vec![]));
        list.push(
            PropertyKind::Limits,
            Instruction::new(vec![Arg::Number(0.0), Arg::Number(1.0)]),
        );
        list.push(
            PropertyKind::Other("setTitle".into()),
            Instruction::new(vec![Arg::Text("Overview".into())]),
        );

        let errors = apply_view("plot", view.as_mut(), &list, &graphics);

        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ApplyError::UnknownGraphic { index: 7, .. }));
        assert!(matches!(errors[1], ApplyError::Arity { count: 7, .. }));
        assert!(matches!(errors[2], ApplyError::Arity { count: 0, .. }));
        assert!(matches!(errors[3], ApplyError::Host { .. }));

        let calls = recorder.calls_for("plot");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "addGraphicEx");
        assert_eq!(calls[0].args, vec!["a", "0", "255"]);
        assert_eq!(calls[1].method, "setTitle");
        assert_eq!(calls[1].args, vec!["Overview"]);
    }
}

use super::{emit_directory, HandlerContext};
use crate::archive::capability::run_with_timeout;
use crate::archive::{EntrySink, ExtractError};

/// Unpack with the external container tool and emit the extracted tree.
///
/// A non-zero exit status is tolerated when the tool still extracted
/// something; 7z reports partial success that way for damaged images.
pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    let Some(tool) = &ctx.capabilities.container_tool else {
        return Err(ExtractError::Unsupported("no container tool available".into()));
    };
    let path = ctx.path.canonicalize()?;
    let dest = sink.arena().directory("generic-")?;

    let tool_name = tool.name();
    let mut cmd = tool.extract_command(&path, dest.path());
    let status = run_with_timeout(&mut cmd, &tool_name, ctx.capabilities.extract_timeout)?;

    let before = sink.emitted();
    emit_directory(dest.path(), sink)?;
    if sink.emitted() == before && !status.success() {
        return Err(ExtractError::ToolFailed {
            tool: tool_name,
            status: status.to_string(),
        });
    }
    if !status.success() {
        log::debug!("{} reported {} for {}", tool_name, status, ctx.path.display());
    }
    Ok(())
}

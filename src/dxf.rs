use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use tracing::debug;

const STYLES_PART: &str = "xl/styles.xml";

/// umya 为 dxf 字体写入的默认字号、字体名等；条件格式字体只应保留颜色等样式。
const FONT_DEFAULTS: [&[u8]; 4] = [b"sz", b"name", b"family", b"scheme"];

/// 去掉 `<dxfs>` 中字体的 sz/name/family/scheme，其余内容原样输出。
pub fn strip_dxf_font_defaults(styles_xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(styles_xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut in_dxf = false;
    let mut in_font = false;
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event().context("无法解析 styles.xml")?;

        if skip_depth > 0 {
            match &event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match &event {
            Event::Start(e) => match e.name().as_ref() {
                b"dxf" => in_dxf = true,
                b"font" if in_dxf => in_font = true,
                tag if in_font && FONT_DEFAULTS.contains(&tag) => {
                    skip_depth = 1;
                    continue;
                }
                _ => {}
            },
            Event::Empty(e) if in_font && FONT_DEFAULTS.contains(&e.name().as_ref()) => continue,
            Event::End(e) => match e.name().as_ref() {
                b"dxf" => in_dxf = false,
                b"font" => in_font = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }

        writer
            .write_event(event)
            .context("无法写出 styles.xml")?;
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("styles.xml 不是有效的 UTF-8")
}

/// 就地重写已保存的 xlsx，只替换 styles.xml，其余条目原样复制。
pub fn tidy_saved_workbook(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("无法读取文件: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .with_context(|| format!("无法解析 xlsx: {}", path.display()))?;

    let mut out = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.name() == STYLES_PART {
            let mut xml = String::new();
            entry.read_to_string(&mut xml)?;
            let cleaned = strip_dxf_font_defaults(&xml)?;
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            out.start_file(STYLES_PART, options)?;
            out.write_all(cleaned.as_bytes())?;
        } else {
            out.raw_copy_file(entry)?;
        }
    }
    let rewritten = out.finish()?.into_inner();

    fs::write(path, rewritten).with_context(|| format!("无法保存文件: {}", path.display()))?;
    debug!(path = %path.display(), "dxf fonts tidied");
    Ok(())
}

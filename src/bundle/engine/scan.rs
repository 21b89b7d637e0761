//! Static import scanning.
//!
//! Only top-level `import`/`export ... from` declarations are collected;
//! dynamic `import()` calls are left to the browser.

use oxc::allocator::Allocator;
use oxc::ast::ast::{ModuleDeclaration, ModuleExportName};
use oxc::parser::Parser;
use oxc::span::SourceType;

/// One static import specifier and the byte range of its string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub specifier: String,
    pub start: usize,
    pub end: usize,
}

/// A named re-export: `export { key as name } from "specifier"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reexport {
    pub name: String,
    pub specifier: String,
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub imports: Vec<ImportSite>,
    pub reexports: Vec<Reexport>,
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

/// Collect the static imports of an ES module. Returns the first parse error.
pub fn scan_imports(code: &str) -> Result<ScanResult, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(error.to_string());
    }

    let mut result = ScanResult::default();
    for stmt in &ret.program.body {
        let Some(decl) = stmt.as_module_declaration() else {
            continue;
        };
        let source = match decl {
            ModuleDeclaration::ImportDeclaration(import) => &import.source,
            ModuleDeclaration::ExportAllDeclaration(all) => &all.source,
            ModuleDeclaration::ExportNamedDeclaration(named) => {
                let Some(source) = &named.source else {
                    continue;
                };
                for spec in &named.specifiers {
                    result.reexports.push(Reexport {
                        name: export_name(&spec.exported),
                        specifier: source.value.to_string(),
                        key: export_name(&spec.local),
                    });
                }
                source
            }
            _ => continue,
        };
        result.imports.push(ImportSite {
            specifier: source.value.to_string(),
            start: source.span.start as usize,
            end: source.span.end as usize,
        });
    }
    Ok(result)
}

/// Replace each import specifier literal with a quoted URL.
///
/// `rewrite` returns `None` to keep a specifier as written.
pub fn rewrite_imports(
    code: &str,
    imports: &[ImportSite],
    mut rewrite: impl FnMut(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;
    for site in imports {
        let Some(url) = rewrite(&site.specifier) else {
            continue;
        };
        out.push_str(&code[cursor..site.start]);
        out.push_str(&serde_json::Value::String(url).to_string());
        cursor = site.end;
    }
    out.push_str(&code[cursor..]);
    out
}

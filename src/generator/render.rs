/// Rust source rendering of one [`InterfaceModel`].
use std::{collections::HashSet, fmt::Write};

use super::naming::{field_ident, is_valid_ident, to_snake_case, to_upper_snake_case};
use crate::{
    error::GenerateError,
    model::{Arg, DataType, InterfaceModel, MethodModel, PropertyModel, SignalModel},
};

pub const HEADER: &str = "// Code generated by docbind. DO NOT EDIT.";

/// Names every generated client defines besides its member wrappers.
const FIXED_ITEMS: &[&str] = &[
    "new",
    "from_adapter_id",
    "path",
    "interface",
    "client",
    "properties",
    "refresh_properties",
    "watch_properties",
    "watch_objects",
    "close",
];

/// Field/argument type for a documentation type.
pub fn rust_type(ty: &DataType) -> &'static str {
    match ty {
        DataType::Bool => "bool",
        DataType::Byte => "u8",
        DataType::Int16 => "i16",
        DataType::UInt16 => "u16",
        DataType::Int32 => "i32",
        DataType::UInt32 => "u32",
        DataType::String => "String",
        DataType::ObjectPath => "ObjectPath",
        DataType::Dict => "PropertyMap",
        DataType::Array(inner) => match inner.as_ref() {
            DataType::Byte => "Vec<u8>",
            DataType::String => "Vec<String>",
            DataType::ObjectPath => "Vec<ObjectPath>",
            _ => "Vec<Variant>",
        },
        _ => "Variant",
    }
}

pub struct RenderContext<'a> {
    pub runtime_crate: &'a str,
    pub path_prefix: &'a str,
}

struct Renderer<'a> {
    model: &'a InterfaceModel,
    ctx: &'a RenderContext<'a>,
    items: HashSet<String>,
    out: String,
}

impl<'a> Renderer<'a> {
    fn fail(&self, reason: String) -> GenerateError {
        GenerateError::Render {
            interface: self.model.name.clone(),
            reason,
        }
    }

    fn claim(&mut self, item: &str) -> Result<(), GenerateError> {
        if !is_valid_ident(item) {
            return Err(self.fail(format!("'{item}' is not a valid identifier")));
        }
        if !self.items.insert(item.to_string()) {
            return Err(self.fail(format!("generated item '{item}' is defined twice")));
        }
        Ok(())
    }

    fn docs(&mut self, indent: &str, text: &str) -> Result<(), GenerateError> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                writeln!(self.out, "{indent}///")?;
            } else {
                writeln!(self.out, "{indent}/// {line}")?;
            }
        }
        Ok(())
    }

    fn header(&mut self) -> Result<(), GenerateError> {
        let model = self.model;
        let rt = self.ctx.runtime_crate;
        writeln!(self.out, "{HEADER}")?;
        writeln!(self.out)?;
        writeln!(self.out, "//! `{}`", model.name)?;
        if !model.title.is_empty() {
            writeln!(self.out, "//!")?;
            writeln!(self.out, "//! {}", model.title)?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "#![allow(unused_imports)]")?;
        writeln!(self.out)?;
        writeln!(self.out, "use std::sync::Arc;")?;
        writeln!(self.out)?;
        writeln!(self.out, "use {rt}::{{")?;
        writeln!(
            self.out,
            "    client::{{Client, ClientConfig, ObjectWatch, PropertyStore, PropertyWatch, Returns, SignalWatch, Transport}},"
        )?;
        writeln!(self.out, "    variant::{{ObjectPath, PropertyMap, Variant}},")?;
        writeln!(self.out, "    DocbindError,")?;
        writeln!(self.out, "}};")?;
        writeln!(self.out)?;
        writeln!(self.out, "pub const INTERFACE: &str = {:?};", model.name)?;
        writeln!(self.out, "pub const SERVICE: &str = {:?};", model.service)?;
        if !model.object_path.is_empty() {
            writeln!(self.out, "/// Documented object path pattern.")?;
            writeln!(self.out, "pub const OBJECT_PATH: &str = {:?};", model.object_path)?;
        }
        if model.scoped_to_adapter() {
            writeln!(self.out, "pub const PATH_PREFIX: &str = {:?};", self.ctx.path_prefix)?;
        }
        for signal in model.signals.iter() {
            let konst = format!("SIGNAL_{}", to_upper_snake_case(&signal.name));
            if !self.items.insert(konst.clone()) {
                return Err(self.fail(format!("generated item '{konst}' is defined twice")));
            }
            writeln!(self.out, "pub const {konst}: &str = {:?};", signal.name)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn record(&mut self, record: &str) -> Result<(), GenerateError> {
        let model = self.model;
        let mut fields = HashSet::new();
        writeln!(self.out, "{}::property_record! {{", self.ctx.runtime_crate)?;
        writeln!(self.out, "    /// Properties exposed by `{}`.", model.name)?;
        writeln!(self.out, "    #[derive(Debug, Clone, Default, PartialEq)]")?;
        writeln!(self.out, "    pub struct {record} {{")?;
        for prop in model.properties.values() {
            let field = field_ident(&prop.name);
            if !is_valid_ident(&field) {
                return Err(self.fail(format!("property '{}' has no valid field name", prop.name)));
            }
            if !fields.insert(field.clone()) {
                return Err(self.fail(format!("record field '{field}' is defined twice")));
            }
            if prop.is_writable() {
                writeln!(self.out, "        #[property({:?}, \"writable\")]", prop.name)?;
            } else {
                writeln!(self.out, "        #[property({:?})]", prop.name)?;
            }
            self.docs("        ", &prop.docs)?;
            writeln!(
                self.out,
                "        pub {field}: {},",
                rust_type(&prop.data_type())
            )?;
        }
        writeln!(self.out, "    }}")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        Ok(())
    }

    fn client(&mut self, name: &str, record: &str) -> Result<(), GenerateError> {
        let model = self.model;
        for item in FIXED_ITEMS {
            self.items.insert(item.to_string());
        }

        if !model.title.is_empty() {
            writeln!(self.out, "/// {}", model.title)?;
            if !model.docs.is_empty() {
                writeln!(self.out, "///")?;
            }
        }
        self.docs("", &model.docs)?;
        writeln!(self.out, "#[derive(Debug, Clone)]")?;
        writeln!(self.out, "pub struct {name} {{")?;
        writeln!(self.out, "    client: Client,")?;
        writeln!(self.out, "    properties: PropertyStore<{record}>,")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        writeln!(self.out, "impl {name} {{")?;

        writeln!(
            self.out,
            "    /// Bind to the object at `object_path` and fetch its properties."
        )?;
        if !model.object_path.is_empty() {
            writeln!(self.out, "    ///")?;
            writeln!(self.out, "    /// Object path: `{}`", model.object_path)?;
        }
        writeln!(
            self.out,
            "    pub fn new(transport: Arc<dyn Transport>, object_path: ObjectPath) -> Result<Self, DocbindError> {{"
        )?;
        writeln!(
            self.out,
            "        let client = Client::new(transport, ClientConfig::new(SERVICE, INTERFACE, object_path));"
        )?;
        writeln!(self.out, "        let this = {name} {{")?;
        writeln!(self.out, "            client,")?;
        writeln!(self.out, "            properties: PropertyStore::default(),")?;
        writeln!(self.out, "        }};")?;
        writeln!(self.out, "        this.refresh_properties()?;")?;
        writeln!(self.out, "        Ok(this)")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out)?;

        if model.scoped_to_adapter() {
            writeln!(
                self.out,
                "    /// Bind to the object of adapter `adapter_id` (e.g. `hci0`)."
            )?;
            writeln!(
                self.out,
                "    pub fn from_adapter_id(transport: Arc<dyn Transport>, adapter_id: &str) -> Result<Self, DocbindError> {{"
            )?;
            writeln!(
                self.out,
                "        Self::new(transport, ObjectPath::new(PATH_PREFIX).join(adapter_id))"
            )?;
            writeln!(self.out, "    }}")?;
            writeln!(self.out)?;
        }

        self.out.push_str(&format!(
            "    pub fn path(&self) -> &ObjectPath {{
        self.client.path()
    }}

    pub fn interface(&self) -> &str {{
        INTERFACE
    }}

    pub fn client(&self) -> &Client {{
        &self.client
    }}

    pub fn properties(&self) -> &PropertyStore<{record}> {{
        &self.properties
    }}

    /// Fetch every property and replace the cached record.
    pub fn refresh_properties(&self) -> Result<(), DocbindError> {{
        let map = self.client.get_all_properties()?;
        self.properties.replace_from_map(&map)?;
        Ok(())
    }}

    /// Subscribe to property changes of this object.
    pub fn watch_properties(&self) -> Result<PropertyWatch, DocbindError> {{
        self.client.watch_properties()
    }}

"
        ));
        if model.roots_hierarchy() {
            writeln!(
                self.out,
                "    /// Subscribe to objects added below or removed from this object."
            )?;
            writeln!(
                self.out,
                "    pub fn watch_objects(&self) -> Result<ObjectWatch, DocbindError> {{"
            )?;
            writeln!(self.out, "        self.client.watch_objects()")?;
            writeln!(self.out, "    }}")?;
            writeln!(self.out)?;
        }
        writeln!(self.out, "    pub fn close(&self) -> Result<(), DocbindError> {{")?;
        writeln!(self.out, "        self.client.disconnect()")?;
        writeln!(self.out, "    }}")?;

        for prop in model.properties.values() {
            self.property(prop)?;
        }
        for method in model.methods.iter() {
            self.method(method)?;
        }
        for signal in model.signals.iter() {
            self.signal(signal)?;
        }
        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn property(&mut self, prop: &PropertyModel) -> Result<(), GenerateError> {
        // Unflagged properties stay reachable through the cached record only.
        if !prop.is_readonly() && !prop.is_writable() {
            return Ok(());
        }
        let field = field_ident(&prop.name);
        let ty = rust_type(&prop.data_type());

        let getter = format!("get_{}", field.trim_end_matches('_'));
        self.claim(&getter)?;
        writeln!(self.out)?;
        self.docs("    ", &prop.docs)?;
        writeln!(
            self.out,
            "    pub fn {getter}(&self) -> Result<{ty}, DocbindError> {{"
        )?;
        writeln!(self.out, "        self.client.get_property_as({:?})", prop.name)?;
        writeln!(self.out, "    }}")?;

        if prop.is_writable() {
            let setter = format!("set_{}", field.trim_end_matches('_'));
            self.claim(&setter)?;
            writeln!(self.out)?;
            writeln!(
                self.out,
                "    pub fn {setter}(&self, value: {ty}) -> Result<(), DocbindError> {{"
            )?;
            writeln!(
                self.out,
                "        self.client.set_property({:?}, Variant::from(value))",
                prop.name
            )?;
            writeln!(self.out, "    }}")?;
        }
        Ok(())
    }

    fn params(&self, member: &str, args: &[Arg]) -> Result<Vec<(String, &'static str)>, GenerateError> {
        let mut seen = HashSet::new();
        let mut params = Vec::with_capacity(args.len());
        for arg in args {
            let ident = field_ident(&arg.name);
            if !is_valid_ident(&ident) {
                return Err(self.fail(format!(
                    "argument '{}' of {member} is not a valid identifier",
                    arg.name
                )));
            }
            if !seen.insert(ident.clone()) {
                return Err(self.fail(format!("argument '{ident}' of {member} is defined twice")));
            }
            params.push((ident, rust_type(&arg.data_type())));
        }
        Ok(params)
    }

    fn method(&mut self, method: &MethodModel) -> Result<(), GenerateError> {
        let fn_name = field_ident(&method.name);
        self.claim(&fn_name)?;
        let params = self.params(&method.name, &method.args)?;
        let returns: Vec<&'static str> = method.return_types().iter().map(rust_type).collect();

        let signature = params
            .iter()
            .map(|(name, ty)| format!(", {name}: {ty}"))
            .collect::<String>();
        let ret_ty = match returns.len() {
            0 => "()".to_string(),
            1 => returns[0].to_string(),
            _ => format!("({})", returns.join(", ")),
        };
        let call_args = params
            .iter()
            .map(|(name, _)| format!("Variant::from({name})"))
            .collect::<Vec<String>>()
            .join(", ");

        writeln!(self.out)?;
        self.docs("    ", &method.docs)?;
        writeln!(
            self.out,
            "    pub fn {fn_name}(&self{signature}) -> Result<{ret_ty}, DocbindError> {{"
        )?;
        let call = format!("self.client.call({:?}, vec![{call_args}])?", method.name);
        match returns.len() {
            0 => {
                writeln!(self.out, "        {call};")?;
                writeln!(self.out, "        Ok(())")?;
            }
            n => {
                writeln!(
                    self.out,
                    "        let mut returns = Returns::new({:?}, {call});",
                    method.name
                )?;
                if n == 1 {
                    writeln!(self.out, "        Ok(returns.take()?)")?;
                } else {
                    let takes = vec!["returns.take()?"; n].join(", ");
                    writeln!(self.out, "        Ok(({takes}))")?;
                }
            }
        }
        writeln!(self.out, "    }}")?;
        Ok(())
    }

    fn signal(&mut self, signal: &SignalModel) -> Result<(), GenerateError> {
        let fn_name = format!("watch_{}", to_snake_case(&signal.name));
        self.claim(&fn_name)?;
        writeln!(self.out)?;
        self.docs("    ", &signal.docs)?;
        if !signal.args.is_empty() {
            if !signal.docs.is_empty() {
                writeln!(self.out, "    ///")?;
            }
            let args = signal
                .args
                .iter()
                .map(|a| format!("{} {}", a.ty, a.name))
                .collect::<Vec<String>>()
                .join(", ");
            writeln!(self.out, "    /// Signal body: `({args})`")?;
        }
        writeln!(
            self.out,
            "    pub fn {fn_name}(&self) -> Result<SignalWatch, DocbindError> {{"
        )?;
        writeln!(
            self.out,
            "        self.client.watch_signal(SIGNAL_{})",
            to_upper_snake_case(&signal.name)
        )?;
        writeln!(self.out, "    }}")?;
        Ok(())
    }
}

/// Render the client module for `model`.
pub fn render(model: &InterfaceModel, ctx: &RenderContext) -> Result<String, GenerateError> {
    let name = model.short_name();
    if !is_valid_ident(name) {
        return Err(GenerateError::Render {
            interface: model.name.clone(),
            reason: format!("'{name}' is not a valid type name"),
        });
    }
    let record = format!("{name}Properties");
    let mut renderer = Renderer {
        model,
        ctx,
        items: HashSet::new(),
        out: String::new(),
    };
    renderer.header()?;
    renderer.record(&record)?;
    renderer.client(name, &record)?;
    Ok(renderer.out)
}

//! Class and enum emitters
//!
//! Members are emitted in a fixed order regardless of source order: fields
//! (class-fields policy), constructors, instance methods, static fields,
//! static methods. A class without an unnamed generative constructor gets a
//! synthesized one.

use std::collections::BTreeMap;

use crate::codegen::{js_string, CodeGenError, Emitter, FieldPolicy};
use crate::ast::ParameterForm;
use crate::ir::*;
use crate::lowering::FACTORY_METHOD;

/// Receiver alias for the instance a named generative constructor builds.
const SELF_ALIAS: &str = "_self";

impl Emitter<'_> {
    pub(crate) fn class(&mut self, class: &ClassDecl, export: &str) -> Result<(), CodeGenError> {
        // Generic arguments are erased; `TypeIR::name` carries none.
        let superclass = class
            .superclass
            .as_ref()
            .filter(|s| s.name != "Object")
            .map(|s| s.name.clone());
        let header = match &superclass {
            Some(base) => format!("{}class {} extends {}", export, class.name, base),
            None => format!("{}class {}", export, class.name),
        };

        self.braced(&header, |e| {
            if e.config.field_initializers == FieldPolicy::ClassFields {
                for field in &class.fields {
                    let line = e.field_declaration(field)?;
                    e.writer.line(line);
                }
            }

            if !class.has_unnamed_generative_constructor() {
                e.synthesized_constructor(class, superclass.as_deref())?;
            }
            for constructor in &class.constructors {
                e.constructor(class, constructor, superclass.as_deref())?;
            }

            for method in &class.methods {
                e.method(method, false)?;
            }
            for field in &class.static_fields {
                let line = e.field_declaration(field)?;
                e.writer.line(format!("static {}", line));
            }
            for method in &class.static_methods {
                e.method(method, true)?;
            }
            Ok(())
        })
    }

    fn field_value(&mut self, field: &FieldDecl) -> Result<Option<String>, CodeGenError> {
        match &field.initializer {
            Some(init) => Ok(Some(self.expr(init)?)),
            None if field.is_late => Ok(None),
            None => Ok(Some("null".to_string())),
        }
    }

    fn field_declaration(&mut self, field: &FieldDecl) -> Result<String, CodeGenError> {
        Ok(match self.field_value(field)? {
            Some(value) => format!("{} = {};", field.name, value),
            None => format!("{};", field.name),
        })
    }

    /// `receiver.field = value;` for every instance field.
    fn field_assignments(&mut self, class: &ClassDecl, receiver: &str) -> Result<(), CodeGenError> {
        for field in &class.fields {
            if let Some(value) = self.field_value(field)? {
                self.writer.line(format!("{}.{} = {};", receiver, field.name, value));
            }
        }
        Ok(())
    }

    fn synthesized_constructor(&mut self, class: &ClassDecl, superclass: Option<&str>) -> Result<(), CodeGenError> {
        let initialize_fields = self.config.field_initializers == FieldPolicy::Constructor;
        let header = if superclass.is_some() {
            "constructor(...args)"
        } else {
            "constructor()"
        };
        self.braced(header, |e| {
            if superclass.is_some() {
                e.writer.line("super(...args);");
            }
            if initialize_fields {
                e.field_assignments(class, "this")?;
            }
            Ok(())
        })
    }

    fn constructor(
        &mut self,
        class: &ClassDecl,
        constructor: &ConstructorDecl,
        superclass: Option<&str>,
    ) -> Result<(), CodeGenError> {
        let params = self.parameters(&constructor.parameters)?;
        match (constructor.kind, &constructor.name) {
            (ConstructorKind::Factory, name) => {
                let name = name.as_deref().unwrap_or(FACTORY_METHOD);
                let header = format!("static {}({})", name, params);
                self.braced(&header, |e| e.function_body(&constructor.body))
            }
            (ConstructorKind::Generative, None) => {
                let header = format!("constructor({})", params);
                self.braced(&header, |e| {
                    if let Some((target, arguments)) = constructor.redirect() {
                        let call = e.redirect_call(&class.name, target.as_deref(), arguments)?;
                        e.writer.line(format!("return {};", call));
                        return Ok(());
                    }
                    if let Some(base) = superclass {
                        e.super_call(constructor, base, "this")?;
                    }
                    if e.config.field_initializers == FieldPolicy::Constructor {
                        e.field_assignments(class, "this")?;
                    }
                    e.initializers(constructor, "this")?;
                    e.function_body(&constructor.body)
                })
            }
            (ConstructorKind::Generative, Some(name)) => {
                let header = format!("static {}({})", name, params);
                self.braced(&header, |e| e.named_generative_body(class, constructor, superclass))
            }
        }
    }

    /// Named generative constructors build the instance with
    /// `Object.create` and run their body with `this` bound to it.
    fn named_generative_body(
        &mut self,
        class: &ClassDecl,
        constructor: &ConstructorDecl,
        superclass: Option<&str>,
    ) -> Result<(), CodeGenError> {
        if let Some((target, arguments)) = constructor.redirect() {
            let call = self.redirect_call(&class.name, target.as_deref(), arguments)?;
            self.writer.line(format!("return {};", call));
            return Ok(());
        }
        self.writer.line(format!(
            "const {} = Object.create({}.prototype);",
            SELF_ALIAS, class.name
        ));
        if let Some(base) = superclass {
            self.super_call(constructor, base, SELF_ALIAS)?;
        }
        self.field_assignments(class, SELF_ALIAS)?;
        self.initializers(constructor, SELF_ALIAS)?;
        let has_body = match &constructor.body {
            FunctionBodyIR::Block { statements } => !statements.is_empty(),
            FunctionBodyIR::Expression { .. } => true,
            FunctionBodyIR::Empty => false,
        };
        if has_body {
            let closer = format!("}}).call({});", SELF_ALIAS);
            self.braced_with("(function ()", &closer, |e| e.function_body(&constructor.body))?;
        }
        self.writer.line(format!("return {};", SELF_ALIAS));
        Ok(())
    }

    fn redirect_call(
        &mut self,
        class_name: &str,
        target: Option<&str>,
        arguments: &ArgumentsIR,
    ) -> Result<String, CodeGenError> {
        let args = self.arguments(arguments)?;
        Ok(match target {
            Some(name) => format!("{}.{}({})", class_name, name, args),
            None => format!("new {}({})", class_name, args),
        })
    }

    /// Super call with explicit initializer arguments plus forwarded
    /// `super.x` parameters.
    fn super_call(
        &mut self,
        constructor: &ConstructorDecl,
        superclass: &str,
        receiver: &str,
    ) -> Result<(), CodeGenError> {
        let explicit = constructor.initializers.iter().find_map(|i| match i {
            InitializerIR::SuperCall {
                constructor,
                arguments,
            } => Some((constructor.as_deref(), arguments)),
            _ => None,
        });

        let mut positional = Vec::new();
        let mut named: BTreeMap<String, String> = BTreeMap::new();
        for parameter in constructor
            .parameters
            .iter()
            .filter(|p| p.form == ParameterForm::SuperForward)
        {
            match parameter.kind {
                ParameterKind::Named => {
                    named.insert(parameter.name.clone(), parameter.name.clone());
                }
                _ => positional.push(parameter.name.clone()),
            }
        }
        let mut target_constructor = None;
        if let Some((name, arguments)) = explicit {
            target_constructor = name;
            for argument in &arguments.positional {
                positional.push(self.expr(argument)?);
            }
            for (key, value) in &arguments.named {
                let value = self.expr(value)?;
                named.insert(key.clone(), value);
            }
        }
        if !named.is_empty() {
            let fields: Vec<String> = named.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
            positional.push(format!("{{ {} }}", fields.join(", ")));
        }
        let args = positional.join(", ");

        match (receiver == "this", target_constructor) {
            (true, None) => self.writer.line(format!("super({});", args)),
            (true, Some(name)) => {
                self.writer.line("super();");
                self.writer
                    .line(format!("Object.assign(this, {}.{}({}));", superclass, name, args));
            }
            (false, None) => self
                .writer
                .line(format!("Object.assign({}, new {}({}));", receiver, superclass, args)),
            (false, Some(name)) => self
                .writer
                .line(format!("Object.assign({}, {}.{}({}));", receiver, superclass, name, args)),
        }
        Ok(())
    }

    /// Initializing formals, then the initializer list in order.
    fn initializers(&mut self, constructor: &ConstructorDecl, receiver: &str) -> Result<(), CodeGenError> {
        for parameter in constructor
            .parameters
            .iter()
            .filter(|p| p.form == ParameterForm::ThisField)
        {
            self.writer
                .line(format!("{}.{} = {};", receiver, parameter.name, parameter.name));
        }
        for initializer in &constructor.initializers {
            match initializer {
                InitializerIR::Field { name, value } => {
                    let value = self.expr(value)?;
                    self.writer.line(format!("{}.{} = {};", receiver, name, value));
                }
                InitializerIR::Assert { condition, message } => {
                    let condition = self.expr(condition)?;
                    let line = match message {
                        Some(message) => format!("console.assert({}, {});", condition, self.expr(message)?),
                        None => format!("console.assert({});", condition),
                    };
                    self.writer.line(line);
                }
                InitializerIR::SuperCall { .. } | InitializerIR::Redirect { .. } => {}
            }
        }
        Ok(())
    }

    pub(crate) fn enumeration(&mut self, e: &EnumDecl, export: &str) {
        self.writer
            .line(format!("{}const {} = Object.freeze({{", export, e.name));
        self.writer.indent();
        for (index, value) in e.values.iter().enumerate() {
            self.writer.line(format!(
                "{}: Object.freeze({{ name: {}, index: {} }}),",
                value,
                js_string(value),
                index
            ));
        }
        self.writer.dedent();
        self.writer.line("});");
    }
}

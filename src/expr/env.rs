//! The variable environment backing a running simulation.
//!
//! A sorted small-vector map: diagrams rarely declare more than a handful
//! of variables, so bindings live inline on the stack, keyed by name with
//! binary-search lookup. Iteration order is deterministic (name order),
//! which keeps simulation traces and host displays stable.

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::EvalError;
use crate::model::{Value, VarType, Variable};

#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    pub name: String,
    pub ty: VarType,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VarEnv {
    inner: SmallVec<[Binding; 8]>,
}

impl VarEnv {
    /// Builds an environment holding every Data Dictionary entry at its
    /// declared initial value.
    pub fn from_dictionary(variables: &[Variable]) -> Self {
        let mut env = Self::default();
        for v in variables {
            env.declare(v);
        }
        env
    }

    fn declare(&mut self, variable: &Variable) {
        let binding = Binding {
            name: variable.name.clone(),
            ty: variable.ty,
            value: variable.initial.clone(),
        };
        match self.position(&variable.name) {
            Ok(i) => self.inner[i] = binding,
            Err(i) => self.inner.insert(i, binding),
        }
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.inner.binary_search_by(|b| b.name.as_str().cmp(name))
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.position(name).ok().map(|i| &self.inner[i])
    }

    /// Current value of a declared variable.
    pub fn read(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|b| &b.value)
    }

    /// Writes a declared variable, enforcing its declared type. Integers
    /// widen into float variables; any other cross-type write is rejected.
    pub fn write(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        let i = self
            .position(name)
            .map_err(|_| EvalError::UndefinedVariable(name.to_string()))?;
        let binding = &mut self.inner[i];
        let value = match (binding.ty, value) {
            (VarType::Float, Value::Int(n)) => Value::Float(n as f64),
            (ty, value) if value.var_type() == ty => value,
            (ty, value) => {
                return Err(EvalError::TypeMismatch(format!(
                    "cannot assign {} value to '{}' declared as {}",
                    value.var_type(),
                    name,
                    ty
                )));
            }
        };
        binding.value = value;
        Ok(())
    }

    /// Re-initializes every binding from the dictionary.
    pub fn reset(&mut self, variables: &[Variable]) {
        self.inner.clear();
        for v in variables {
            self.declare(v);
        }
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> Vec<Variable> {
        vec![
            Variable {
                name: "timer".into(),
                ty: VarType::Int,
                initial: Value::Int(0),
            },
            Variable {
                name: "ratio".into(),
                ty: VarType::Float,
                initial: Value::Float(0.5),
            },
        ]
    }

    #[test]
    fn iteration_is_name_ordered() {
        let env = VarEnv::from_dictionary(&dict());
        let names: Vec<_> = env.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["ratio", "timer"]);
    }

    #[test]
    fn writes_enforce_declared_types() {
        let mut env = VarEnv::from_dictionary(&dict());
        env.write("timer", Value::Int(3)).unwrap();
        assert_eq!(env.read("timer"), Some(&Value::Int(3)));

        // int widens into a float variable
        env.write("ratio", Value::Int(2)).unwrap();
        assert_eq!(env.read("ratio"), Some(&Value::Float(2.0)));

        assert!(matches!(
            env.write("timer", Value::Str("oops".into())),
            Err(EvalError::TypeMismatch(_))
        ));
        assert!(matches!(
            env.write("ghost", Value::Int(1)),
            Err(EvalError::UndefinedVariable(_))
        ));
    }

    #[test]
    fn reset_restores_initial_values() {
        let vars = dict();
        let mut env = VarEnv::from_dictionary(&vars);
        env.write("timer", Value::Int(42)).unwrap();
        env.reset(&vars);
        assert_eq!(env.read("timer"), Some(&Value::Int(0)));
    }
}

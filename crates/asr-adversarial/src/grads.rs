//! Буферы градиентов по блокам.
//!
//! В candle `backward()` каждый раз возвращает новый `GradStore`. Буфер
//! накапливает градиенты только для параметров своего блока между
//! обнулениями, чтобы шаг оптимизатора применял сумму нескольких backward.

use candle_core::backprop::GradStore;
use candle_core::{Result, Tensor, Var};

pub struct GradBuffer {
    name: &'static str,
    vars: Vec<Var>,
    grads: Vec<Option<Tensor>>,
}

impl GradBuffer {
    pub fn new(name: &'static str, vars: Vec<Var>) -> Self {
        let grads = vec![None; vars.len()];
        Self { name, vars, grads }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    /// Обнулить накопленные градиенты.
    pub fn zero(&mut self) {
        self.grads.iter_mut().for_each(|g| *g = None);
    }

    /// Добавить градиенты своих параметров из `store`.
    ///
    /// Возвращает количество параметров, получивших градиент.
    pub fn accumulate(&mut self, store: &GradStore) -> Result<usize> {
        let mut touched = 0;
        for (var, slot) in self.vars.iter().zip(self.grads.iter_mut()) {
            let Some(grad) = store.get(var.as_tensor()) else {
                continue;
            };
            let grad = grad.detach();
            *slot = Some(match slot.take() {
                Some(acc) => (acc + grad)?,
                None => grad,
            });
            touched += 1;
        }
        Ok(touched)
    }

    /// Есть ли хотя бы один накопленный градиент.
    pub fn is_populated(&self) -> bool {
        self.grads.iter().any(Option::is_some)
    }

    /// Накопленный градиент параметра.
    pub fn grad(&self, var: &Var) -> Option<&Tensor> {
        self.vars
            .iter()
            .position(|v| v.id() == var.id())
            .and_then(|i| self.grads[i].as_ref())
    }

    /// Записать накопленные градиенты в `base` для передачи оптимизатору.
    ///
    /// Параметры без накопленного градиента удаляются из `base`.
    pub fn fill_store(&self, mut base: GradStore) -> GradStore {
        for (var, grad) in self.vars.iter().zip(&self.grads) {
            match grad {
                Some(g) => {
                    base.insert(var.as_tensor(), g.clone());
                }
                None => {
                    base.remove(var.as_tensor());
                }
            }
        }
        base
    }
}
